#![allow(dead_code)]

pub mod warn;
pub mod util;
pub mod config;

pub mod value;
pub mod helper_functions;
pub mod binding;
pub mod declaration;
pub mod template_parser;
pub mod element;
pub mod elements;
pub mod registry;
pub mod component;

pub mod element_id;
pub mod address;
pub mod page_cache;
pub mod session;
pub mod context;
pub mod dispatch;
pub mod direct_action;
pub mod router;
pub mod application;

pub mod http_request_method;
pub mod http_response_status_codes;
pub mod url_encoding;
pub mod request;
pub mod response;
pub mod webutils;
pub mod apachelog;
pub mod in_threadpool;
pub mod rouille_runner;
