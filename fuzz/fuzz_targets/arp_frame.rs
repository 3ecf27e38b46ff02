#![no_main]

use std::error::Error;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = fuzz_arp_frame(data);
});

fn fuzz_arp_frame(bytes: &[u8]) -> Result<(), Box<dyn Error>> {
    let packet = creak::ArpPacket::from_bytes(bytes)?;

    // Whatever parses must serialize back to the same leading bytes.
    let written = packet.to_bytes();
    assert_eq!(&written[..], &bytes[..written.len()]);

    Ok(())
}
