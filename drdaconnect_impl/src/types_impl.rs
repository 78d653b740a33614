pub(crate) mod datetime;
pub(crate) mod packed_decimal;
