/// Cross target the library must keep building for.
pub const TARGET: &str = "thumbv7em-none-eabihf";
pub const PACKAGE: &str = "display-bus";
