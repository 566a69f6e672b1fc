#![allow(non_snake_case)]

pub mod calendar;
pub mod config;
pub mod handler;
pub mod models;
pub mod runtime;
pub mod service;
pub mod storage;
pub mod tasks;
