//! Peer registration on top of the radio's peer list.
use crate::{MacAddress, PeerEntry, Radio, RadioResult, KEY_LEN};

/// The address every node uses in broadcast mode.
///
/// Read as decimal, the octets are the ASCII codes of "RIOTOS".
pub const SHARED_ADDRESS: MacAddress = MacAddress::new([0x82, 0x73, 0x79, 0x84, 0x79, 0x83]);

/// The outcome of [add_peer].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeerRegistration {
    /// The peer was added to the radio's list.
    Added,
    /// The peer was already known.
    AlreadyKnown,
}

/// Register a peer with the radio, unless it's already known.
pub fn add_peer<R: Radio>(
    radio: &mut R,
    address: MacAddress,
    channel: u8,
    key: Option<[u8; KEY_LEN]>,
) -> RadioResult<PeerRegistration> {
    if radio.peer_exists(&address) {
        return Ok(PeerRegistration::AlreadyKnown);
    }
    let peer = PeerEntry {
        address,
        channel,
        key,
    };
    let res = radio.add_peer(&peer);
    debug!(
        "Adding peer {:?} on channel {} encrypted: {}. Result: {:?}",
        address,
        channel,
        key.is_some(),
        res
    );
    res.map(|_| PeerRegistration::Added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRadio;

    #[test]
    fn registering_twice_adds_one_entry() {
        let mut radio = MockRadio::default();
        let address = MacAddress::new([0x24, 0x0a, 0xc4, 0x00, 0x00, 0x01]);
        assert_eq!(
            add_peer(&mut radio, address, 6, None),
            Ok(PeerRegistration::Added)
        );
        assert_eq!(
            add_peer(&mut radio, address, 6, None),
            Ok(PeerRegistration::AlreadyKnown)
        );
        assert_eq!(radio.peers.len(), 1);
    }

    #[test]
    fn key_marks_peer_encrypted() {
        let mut radio = MockRadio::default();
        add_peer(&mut radio, SHARED_ADDRESS, 1, Some([0x42; KEY_LEN])).unwrap();
        assert_eq!(radio.peers[0].key, Some([0x42; KEY_LEN]));
        assert_eq!(radio.peers[0].channel, 1);
    }
}
