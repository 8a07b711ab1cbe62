pub mod actuator;
pub mod simulator_link;
#[cfg(test)]
mod test;
