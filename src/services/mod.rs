pub mod activity_log;
pub mod dispatch_service;
pub mod extraction_service;
pub mod folder_service;
pub mod instance_service;
pub mod launch_service;
pub mod naming_service;
pub mod operator_service;
pub mod placement_service;
pub mod queue_service;
pub mod rename_flow;
pub mod sort_flow;
pub mod stability_service;
pub mod watch_service;
pub mod worker_service;
