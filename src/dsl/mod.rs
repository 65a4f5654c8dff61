pub mod builder;

pub use builder::BlueprintBuilder;
