mod packet_queue;
mod quit;

pub use packet_queue::{Dequeue, PacketQueue, QueueError};
pub use quit::QuitSignal;
