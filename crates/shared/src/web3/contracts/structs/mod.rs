pub mod workable_job;
pub mod work_receipt;
