use creak::forge::{build_request, build_spoofed_reply};
use creak::MacAddr;
use std::error::Error;
use std::net::Ipv4Addr;

fn main() -> Result<(), Box<dyn Error>> {
    let source_mac = MacAddr::new(0x7e, 0x12, 0xac, 0xc4, 0x53, 0xd0);
    let victim_ipv4 = Ipv4Addr::new(192, 168, 1, 20);
    let gateway_ipv4 = Ipv4Addr::new(192, 168, 1, 1);

    println!("who-has {gateway_ipv4} tell {victim_ipv4}");
    dump(&build_request(source_mac, victim_ipv4, gateway_ipv4).to_bytes());

    println!("{gateway_ipv4} is-at {source_mac} (spoofed)");
    dump(&build_spoofed_reply(source_mac, Some(victim_ipv4), Some(gateway_ipv4))?.to_bytes());

    Ok(())
}

fn dump(frame: &[u8]) {
    for (i, octet) in frame.iter().enumerate() {
        if i > 0 && i % 10 == 0 {
            println!();
        }

        print!("{octet:02x}");

        if i % 10 != 9 {
            print!(" ");
        }
    }

    println!();
}
