#![allow(dead_code)]

pub mod fake_svn;
pub mod fixtures;
