//! Recovery policies for malformed frames.

/// How a receiver reacts to a frame it refuses to carry.
///
/// The policy applies to oversized length prefixes. Transport errors and
/// truncated streams always end the connection regardless of policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RecoveryPolicy {
    /// Skip the declared payload and resume at the next length prefix.
    ///
    /// The oversized payload is consumed without being buffered, so the
    /// stream resynchronises on the following wire message.
    #[default]
    Drop,

    /// Terminate the connection immediately.
    Disconnect,
}

impl RecoveryPolicy {
    /// Returns the policy name as a static string for metrics and logging.
    ///
    /// # Examples
    ///
    /// ```
    /// use framecast::codec::RecoveryPolicy;
    ///
    /// assert_eq!(RecoveryPolicy::Drop.as_str(), "drop");
    /// assert_eq!(RecoveryPolicy::Disconnect.as_str(), "disconnect");
    /// ```
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Disconnect => "disconnect",
        }
    }
}
