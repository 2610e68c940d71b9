//! An in-process demonstration of the unbuffered transmit path.
//!
//! One thread plays driver and remote peer at once: it parks on the
//! interface's tx-pending mailbox, then polls the connection, drains staged
//! segments and acknowledges them — while the main thread blocks in `send`
//! until its whole buffer is confirmed.
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use txpath::iface::{Iface, Netif};
use txpath::neighbor::HwAddr;
use txpath::nic::SlotDevice;
use txpath::tcp::{ArpPolicy, Config, Conn, Events};
use txpath::time::Instant;

fn main() {
    let iface = Arc::new(Iface::new(8));
    let peer = Ipv4Addr::new(192, 0, 2, 80);
    iface.fill_neighbor(peer, HwAddr([2, 0, 0, 0, 0, 80]), None);

    let conn = Conn::new(
        iface.clone() as Arc<dyn Netif>,
        peer,
        Config { mss: 512, window: 8_192, arp: ArpPolicy::CheckFirst, ..Config::default() },
    );

    let done = Arc::new(AtomicBool::new(false));
    let driver = {
        let conn = conn.clone();
        let iface = iface.clone();
        let done = done.clone();
        thread::spawn(move || {
            // Park until the stack announces pending outbound data.
            let peer = iface.wait_pending();
            let isn = conn.state().sndseq;
            let mut dev = SlotDevice::new();
            let mut acked = 0;

            while !done.load(Ordering::SeqCst) {
                conn.dispatch(&mut dev, Events::POLL, Instant::now());
                match dev.take() {
                    Some(segment) => {
                        // The remote end acknowledges everything it sees.
                        acked += segment.len();
                        println!("peer {}: segment of {} bytes, acking {}", peer, segment.len(), acked);
                        conn.state().ackno = isn + acked;
                        conn.dispatch(&mut dev, Events::ACK, Instant::now());
                    }
                    None => thread::sleep(std::time::Duration::from_millis(1)),
                }
            }
        })
    };

    let data: Vec<u8> = b"all of this goes out straight from one caller-owned buffer "
        .iter()
        .copied()
        .cycle()
        .take(4_096)
        .collect();

    match conn.send(&data) {
        Ok(sent) => println!("send: {} bytes acknowledged by the peer", sent),
        Err(err) => println!("send failed: {}", err),
    }

    done.store(true, Ordering::SeqCst);
    driver.join().unwrap();
}
