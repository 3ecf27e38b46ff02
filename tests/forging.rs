use creak::arp::{self, Operation};
use creak::forge::{build_restore_reply, build_spoofed_reply, FRAME_LEN};
use creak::{enet, ArpPacket, Error as CreakError, MacAddr};
use std::{error::Error, net::Ipv4Addr};

// A gratuitous-looking reply as captured on the wire, padded to the Ethernet
// minimum of 60 bytes.
const CAPTURED_REPLY: [u8; 60] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // dest
    0x7e, 0x12, 0xac, 0xc4, 0x53, 0xd0, // source
    0x08, 0x06, // arp
    0x00, 0x01, 0x08, 0x00, 0x06, 0x04, 0x00, 0x02, // htype ptype hlen plen op
    0x7e, 0x12, 0xac, 0xc4, 0x53, 0xd0, 0xc0, 0xa8, 0x01, 0x01, // sender
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xc0, 0xa8, 0x01, 0x14, // target
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // padding
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

const SOURCE: MacAddr = MacAddr::new(0x7e, 0x12, 0xac, 0xc4, 0x53, 0xd0);
const GATEWAY: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);
const VICTIM: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 20);

#[test]
fn test_spoofed_reply_matches_capture() -> Result<(), Box<dyn Error>> {
    let reply = build_spoofed_reply(SOURCE, Some(VICTIM), Some(GATEWAY))?;
    let bytes = reply.to_bytes();
    assert_eq!(bytes.len(), FRAME_LEN);
    assert_eq!(&bytes[..], &CAPTURED_REPLY[..FRAME_LEN]);
    Ok(())
}

#[test]
fn test_captured_reply_parses_through_every_layer() -> Result<(), Box<dyn Error>> {
    let frame = enet::Frame::new(&CAPTURED_REPLY[..])?;
    assert_eq!(frame.dest(), MacAddr::BROADCAST);
    assert_eq!(frame.length_type(), enet::LengthType::Type(enet::EtherType::Arp));

    let message = arp::Packet::new(&frame.payload()[..arp::HEADER_LEN])?;
    assert!(message.is_ethernet_ipv4());
    assert_eq!(message.operation(), Operation::Reply);
    assert_eq!(message.sender_protocol_addr(), GATEWAY);

    let packet = ArpPacket::from_bytes(&CAPTURED_REPLY)?;
    assert_eq!(packet.sender_mac, SOURCE);
    assert_eq!(packet.target_mac, MacAddr::zero());
    assert_eq!(packet.target_ip, VICTIM);
    Ok(())
}

#[test]
fn test_non_arp_frames_are_rejected() {
    let mut ipv4 = CAPTURED_REPLY;
    ipv4[12..14].copy_from_slice(&[0x08, 0x00]);
    assert!(matches!(ArpPacket::from_bytes(&ipv4), Err(CreakError::CannotParse(_))));

    let mut token_ring = CAPTURED_REPLY;
    token_ring[14..16].copy_from_slice(&[0x00, 0x06]);
    assert!(ArpPacket::from_bytes(&token_ring).is_err());

    assert!(ArpPacket::from_bytes(&CAPTURED_REPLY[..FRAME_LEN - 1]).is_err());
}

#[test]
fn test_missing_addresses_cannot_be_forged() {
    assert!(matches!(
        build_spoofed_reply(SOURCE, None, Some(GATEWAY)),
        Err(CreakError::ConstructionError(_))
    ));
    assert!(matches!(
        build_spoofed_reply(SOURCE, Some(VICTIM), None),
        Err(CreakError::ConstructionError(_))
    ));
}

#[test]
fn test_restore_undoes_spoofed_mapping() -> Result<(), Box<dyn Error>> {
    let gateway_mac = MacAddr::new(0xbc, 0xd0, 0x74, 0x0d, 0x9c, 0x12);
    let victim_mac = MacAddr::new(0x3c, 0x22, 0xfb, 0x00, 0x11, 0x22);

    let spoofed = build_spoofed_reply(SOURCE, Some(VICTIM), Some(GATEWAY))?;
    let restore = build_restore_reply(gateway_mac, GATEWAY, victim_mac, VICTIM);

    // Same claim about the same address, with the genuine owner this time.
    assert_eq!(restore.sender_ip, spoofed.sender_ip);
    assert_eq!(restore.target_ip, spoofed.target_ip);
    assert_eq!(restore.sender_mac, gateway_mac);
    assert_eq!(restore.ether_dst, victim_mac);
    assert_eq!(restore.arp_op, Operation::Reply);

    let parsed = ArpPacket::from_bytes(&restore.to_bytes())?;
    assert_eq!(parsed, restore);
    Ok(())
}
