use creak::exec::SystemRunner;
use creak::resolve::{DeviceMac, Resolver};
use creak::route;
use std::error::Error;
use std::net::Ipv4Addr;
use std::time::Duration;

/// find the default gateway and resolve MAC addresses
#[derive(argh::FromArgs, Debug)]
struct Args {
    /// address to resolve, defaults to the default gateway
    #[argh(positional)]
    target: Option<Ipv4Addr>,

    /// local interface, defaults to the one the gateway sits behind
    #[argh(option, short = 'i')]
    interface: Option<String>,

    /// seconds to wait for each probe, defaults to the configured bound
    #[argh(option)]
    timeout: Option<u64>,

    /// ask the network with ARP requests instead of the neighbor cache
    #[argh(switch)]
    active: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args: Args = argh::from_env();
    let resolver = Resolver::system();
    let timeout = args
        .timeout
        .map_or(resolver.config().probe_timeout, Duration::from_secs);

    let gateway = route::default_gateway_route(resolver.config())?;
    println!("gateway {} via {}", gateway.gateway, gateway.interface);

    let interface = args.interface.unwrap_or(gateway.interface);
    let target = args.target.unwrap_or(gateway.gateway);

    match resolver.resolve_device_mac(&interface)? {
        DeviceMac::Hardware(mac) => println!("{interface} is {mac}"),
        DeviceMac::Approximated(mac) => {
            println!("{interface} is unreadable, approximated as {mac}");
        }
    }

    if args.active {
        active(&resolver, &interface, target, timeout)?;
    } else {
        let mac = resolver.resolve_ip_mac(target, timeout)?;
        println!("{target} is at {mac}");
    }

    Ok(())
}

#[cfg(target_os = "linux")]
fn active(
    resolver: &Resolver<SystemRunner>,
    interface: &str,
    target: Ipv4Addr,
    timeout: Duration,
) -> Result<(), Box<dyn Error>> {
    let mut socket = creak::socket::RawSocket::open(interface)?;
    match resolver.resolve_ip_mac_active(&mut socket, target, timeout, 2)? {
        Some(mac) => println!("{target} is at {mac}"),
        None => println!("no reply from {target}"),
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn active(
    _resolver: &Resolver<SystemRunner>,
    _interface: &str,
    _target: Ipv4Addr,
    _timeout: Duration,
) -> Result<(), Box<dyn Error>> {
    println!("Active resolution only works on Linux");
    Ok(())
}
