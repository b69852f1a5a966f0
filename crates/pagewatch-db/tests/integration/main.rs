mod common;
mod page_tests;
mod post_tests;
mod session_tests;
