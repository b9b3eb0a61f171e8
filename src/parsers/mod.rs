pub mod bruno;

pub use bruno::BruFileParser;
