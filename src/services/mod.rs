pub mod remote_store;
pub mod s3_store;
pub mod storage_service;
