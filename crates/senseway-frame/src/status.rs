/// Status byte embedded at the start of most response payloads.
///
/// This is the device's verdict on a request, not a transport status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    Error = 0,
    Success = 1,
    Timeout = 2,
    Data = 3,
    WrongMessage = 4,
    BrokenPacket = 5,
}

impl Status {
    /// Decode a status byte; unknown values yield `None`.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Status::Error),
            1 => Some(Status::Success),
            2 => Some(Status::Timeout),
            3 => Some(Status::Data),
            4 => Some(Status::WrongMessage),
            5 => Some(Status::BrokenPacket),
            _ => None,
        }
    }

    /// Success or a data-bearing reply.
    pub fn is_ok(self) -> bool {
        matches!(self, Status::Success | Status::Data)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Error => "error",
            Status::Success => "success",
            Status::Timeout => "timeout",
            Status::Data => "data",
            Status::WrongMessage => "wrong-message",
            Status::BrokenPacket => "broken-packet",
        };
        f.write_str(name)
    }
}
