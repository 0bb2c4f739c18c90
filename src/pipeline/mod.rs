mod dispatch;

#[cfg(test)]
mod tests;

pub use dispatch::RequestPipeline;
