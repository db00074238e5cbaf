//! Bus message envelope.
//!
//! A message is a 16-byte-aligned record of a type tag plus four payload
//! words. Payload semantics are defined per type by the subscribing
//! subsystem; the bus itself never inspects them.

/// The closed set of message types the core understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageType {
    /// Request to instantiate a task (handled by the task service).
    SysLoadTask = 1,
    /// Keyboard input event, re-published by the kernel's interrupt path.
    EventKeyboard = 2,
    /// Kernel-internal notification.
    KernelEvent = 3,
    /// Synchronous hardware-resource lookup (intercepted by the proxy).
    RequestHardwareInfo = 4,
    /// The frame buffer changed; the display should be refreshed.
    EventVramUpdated = 5,
    /// Short text routed to the kernel log.
    EventPrint = 0x100,
}

/// Number of payload words in a message.
pub const PAYLOAD_WORDS: usize = 4;

/// Number of payload bytes available to inline text.
pub const PAYLOAD_BYTES: usize = PAYLOAD_WORDS * 8;

/// Bus message: a type tag and four payload words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, align(16))]
pub struct Message {
    /// Message type; selects the subscriber entry on dispatch.
    pub ty: MessageType,
    /// Payload words, semantics defined by `ty`.
    pub payload: [u64; PAYLOAD_WORDS],
}

impl Message {
    /// Create a message with an empty payload.
    #[inline]
    #[must_use]
    pub const fn new(ty: MessageType) -> Self {
        Self {
            ty,
            payload: [0; PAYLOAD_WORDS],
        }
    }

    /// Create a message from raw payload words.
    #[inline]
    #[must_use]
    pub const fn with_payload(ty: MessageType, payload: [u64; PAYLOAD_WORDS]) -> Self {
        Self { ty, payload }
    }

    /// Create a text-carrying message; `text` is truncated to
    /// [`PAYLOAD_BYTES`] and packed little-endian into the payload words.
    #[must_use]
    pub fn with_text(ty: MessageType, text: &str) -> Self {
        let mut bytes = [0u8; PAYLOAD_BYTES];
        let n = text.len().min(PAYLOAD_BYTES);
        bytes[..n].copy_from_slice(&text.as_bytes()[..n]);

        let mut payload = [0u64; PAYLOAD_WORDS];
        for (i, word) in payload.iter_mut().enumerate() {
            let mut w = [0u8; 8];
            w.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
            *word = u64::from_le_bytes(w);
        }
        Self { ty, payload }
    }

    /// Get a payload word by index.
    #[inline]
    #[must_use]
    pub const fn word(&self, index: usize) -> Option<u64> {
        if index < PAYLOAD_WORDS {
            Some(self.payload[index])
        } else {
            None
        }
    }

    /// Set a payload word by index. Returns `false` for an out-of-range
    /// index.
    #[inline]
    pub fn set_word(&mut self, index: usize, value: u64) -> bool {
        if index < PAYLOAD_WORDS {
            self.payload[index] = value;
            true
        } else {
            false
        }
    }

    /// The payload as little-endian bytes.
    #[must_use]
    pub fn payload_bytes(&self) -> [u8; PAYLOAD_BYTES] {
        let mut bytes = [0u8; PAYLOAD_BYTES];
        for (i, word) in self.payload.iter().enumerate() {
            bytes[i * 8..i * 8 + 8].copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    /// Length of the inline text: payload bytes up to the first NUL.
    #[must_use]
    pub fn text_len(&self) -> usize {
        let bytes = self.payload_bytes();
        bytes.iter().position(|&b| b == 0).unwrap_or(PAYLOAD_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_16_byte_aligned() {
        assert_eq!(core::mem::align_of::<Message>(), 16);
    }

    #[test]
    fn test_word_get_set() {
        let mut msg = Message::new(MessageType::KernelEvent);
        assert!(msg.set_word(3, 42));
        assert_eq!(msg.word(3), Some(42));
        assert_eq!(msg.word(4), None);
        assert!(!msg.set_word(4, 99));
    }

    #[test]
    fn test_text_roundtrip() {
        let msg = Message::with_text(MessageType::EventPrint, "hello");
        let bytes = msg.payload_bytes();
        assert_eq!(&bytes[..5], b"hello");
        assert_eq!(msg.text_len(), 5);
    }

    #[test]
    fn test_text_truncation() {
        let long = "0123456789abcdef0123456789abcdefOVERFLOW";
        let msg = Message::with_text(MessageType::EventPrint, long);
        assert_eq!(msg.text_len(), PAYLOAD_BYTES);
        assert_eq!(&msg.payload_bytes()[..], &long.as_bytes()[..PAYLOAD_BYTES]);
    }
}
