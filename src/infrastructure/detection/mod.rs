pub mod magic_resolver;
