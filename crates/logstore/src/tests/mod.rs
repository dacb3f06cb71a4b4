mod helpers;
mod reader_tests;
