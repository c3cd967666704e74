// Actuator side: driver trait, Maestro serial implementation, simulated bus,
// and the shared handle that serializes all access to the one physical bus.
pub mod driver;
pub mod bus;
pub mod maestro;
pub mod simulated;
