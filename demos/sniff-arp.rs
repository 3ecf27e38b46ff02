use std::error::Error;

/// print the ARP frames seen on an interface
#[derive(argh::FromArgs, Debug)]
struct Args {
    /// interface to listen on
    #[argh(positional)]
    interface: String,
}

#[cfg(target_os = "linux")]
fn main() -> Result<(), Box<dyn Error>> {
    use creak::arp::Operation;
    use creak::socket::RawSocket;
    use creak::ArpPacket;
    use std::time::Duration;

    env_logger::init();
    let Args { interface } = argh::from_env::<Args>();

    let socket = RawSocket::open(&interface)?;
    println!("listening on {interface} ({} / {})", socket.mac(), socket.ip());

    let buffer = &mut [0; 65536];
    loop {
        let Some(read) = socket.recv_frame(buffer, Duration::from_secs(1))? else {
            continue;
        };

        match ArpPacket::from_bytes(&buffer[..read]) {
            Ok(packet) => match packet.arp_op {
                Operation::Request => println!(
                    "{} > {}: who-has {} tell {}",
                    packet.ether_src, packet.ether_dst, packet.target_ip, packet.sender_ip
                ),
                Operation::Reply => println!(
                    "{} > {}: {} is-at {}",
                    packet.ether_src, packet.ether_dst, packet.sender_ip, packet.sender_mac
                ),
                Operation::Invalid(op) => println!(
                    "{} > {}: unknown operation {op}",
                    packet.ether_src, packet.ether_dst
                ),
            },
            Err(err) => println!("bytes={read} not understood: {err}\n{:x?}\n", &buffer[..read]),
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn main() -> Result<(), Box<dyn Error>> {
    let _ = argh::from_env::<Args>();
    println!("This example only works on Linux");
    Ok(())
}
