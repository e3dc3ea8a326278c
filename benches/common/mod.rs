#![allow(dead_code)]
use std::fs;

pub const WORKLOADS: [(&str, &str); 2] = [
    ("fib", "tests/programs/fib/program.go"),
    ("sort", "tests/programs/sort/program.go"),
];

pub fn load_source(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|err| panic!("read {path}: {err}"))
}
