pub mod bitcoin;
pub mod detect;
pub mod liquid;
pub mod musig;
pub mod script;
pub mod taproot;
