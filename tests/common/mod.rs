#![allow(dead_code)]

pub use wmlkit_test_utils::{builders, fake_tools, init_tracing, with_timeout};

use std::error::Error;

pub type TestResult = Result<(), Box<dyn Error>>;
