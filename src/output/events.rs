use crate::model::Member;
use crate::LdesError;
use std::fmt;

/// Everything a replication reports to its consumer
#[derive(Debug)]
pub enum StreamEvent {
    /// A member ready for the consumer
    Member(Member),

    /// A fragment was fetched and classified
    FragmentFetched {
        url: String,
        final_url: String,
        mutable: bool,
        members: usize,
        relations: usize,
    },

    /// A fragment was recorded as mutable for the first time
    MutableRecorded { url: String, max_age: Option<u64> },

    /// A poll cycle started refetching the mutable fragments
    PollCycle { cycle: u64, fragments: usize },

    /// One fragment or member failed; replication continues
    Error(LdesError),

    /// No further events will follow
    Closed,
}

impl StreamEvent {
    pub fn is_member(&self) -> bool {
        matches!(self, Self::Member(_))
    }

    pub fn into_member(self) -> Option<Member> {
        match self {
            Self::Member(member) => Some(member),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Member(_) => "member",
            Self::FragmentFetched { .. } => "fragment-fetched",
            Self::MutableRecorded { .. } => "mutable-recorded",
            Self::PollCycle { .. } => "poll-cycle",
            Self::Error(_) => "error",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for StreamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member(member) => write!(f, "member {}", member.id),
            Self::FragmentFetched {
                url,
                mutable,
                members,
                relations,
                ..
            } => write!(
                f,
                "fetched {} ({}, {} member(s), {} relation target(s))",
                url,
                if *mutable { "mutable" } else { "immutable" },
                members,
                relations
            ),
            Self::MutableRecorded { url, max_age } => match max_age {
                Some(age) => write!(f, "mutable fragment {} (max-age {}s)", url, age),
                None => write!(f, "mutable fragment {}", url),
            },
            Self::PollCycle { cycle, fragments } => {
                write!(f, "poll cycle {} over {} fragment(s)", cycle, fragments)
            }
            Self::Error(e) => write!(f, "error: {}", e),
            Self::Closed => write!(f, "closed"),
        }
    }
}
