#![allow(dead_code)]

pub mod api_app;
pub mod stub_gateway;
