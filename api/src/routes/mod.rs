mod audio;
mod platforms;
mod tasks;

pub use audio::extract_audio_handler;
pub use platforms::video_task;
pub use tasks::create_task;
pub use tasks::delete_task;
pub use tasks::get_subtitle;
pub use tasks::get_task;
pub use tasks::list_tasks;
