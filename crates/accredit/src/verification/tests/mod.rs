mod common;

mod registry;
