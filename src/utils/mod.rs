pub mod sync;
pub mod table_naming;
