pub mod error;
pub mod path_expr;
pub mod test_result;
pub mod work_item;
