pub mod naming;
pub mod test_helpers;
