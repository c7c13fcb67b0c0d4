pub mod archive;
pub mod config;
pub mod geo;
pub mod lookup;
#[cfg(test)]
mod test_utils;
mod uri_tools;
