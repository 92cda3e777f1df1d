//! Interactive multi-member demo (spec.md §1 "the demo driver", an external
//! collaborator — this binary is illustrative, not part of the coherence
//! subsystem itself). Start one of these per terminal on the same LAN
//! segment; `set`/`get`/`del` against the "default" cache and watch the
//! other members mirror or invalidate it.

use std::io::{self, BufRead, Write};

use mccache_admin::{init_logging, Config};
use mccache_base::Result;
use mccache_core::Coordinator;

fn main() -> Result<()> {
    let config = Config::from_env();
    init_logging(&config)?;

    let coordinator = Coordinator::start(&config)?;
    coordinator.announce();
    let cache: mccache_core::TypedCache<String, String> = coordinator.get_cache(Some("default"))?;

    println!("mccache-demo: posture={:?} group={}:{}", config.posture, config.mc_group, config.mc_port);
    print_help();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let mut words = line.split_whitespace();
        match words.next() {
            Some("set") => {
                let (Some(key), Some(value)) = (words.next(), words.next()) else {
                    println!("usage: set <key> <value>");
                    continue;
                };
                match cache.set(key.to_string(), value.to_string(), true) {
                    Ok(()) => println!("ok"),
                    Err(error) => println!("error: {error:?}"),
                }
            }
            Some("get") => {
                let Some(key) = words.next() else {
                    println!("usage: get <key>");
                    continue;
                };
                match cache.get(&key.to_string()) {
                    Ok(Some(value)) => println!("{value}"),
                    Ok(None) => println!("(absent)"),
                    Err(error) => println!("error: {error:?}"),
                }
            }
            Some("del") => {
                let Some(key) = words.next() else {
                    println!("usage: del <key>");
                    continue;
                };
                match cache.delete(&key.to_string(), true) {
                    Ok(_) => println!("ok"),
                    Err(error) => println!("error: {error:?}"),
                }
            }
            Some("keys") => {
                match cache.keys() {
                    Ok(keys) => println!("{}", keys.join(", ")),
                    Err(error) => println!("error: {error:?}"),
                }
            }
            Some("peers") => {
                let peers = coordinator.peers();
                println!("{} peer(s): {peers:?}", peers.len());
            }
            Some("help") => print_help(),
            Some("quit") | Some("exit") => break,
            Some(other) => println!("unrecognised command {other:?}, try `help`"),
            None => {}
        }
        io::stdout().flush().ok();
    }

    coordinator.shutdown();
    Ok(())
}

fn print_help() {
    println!("commands: set <key> <value> | get <key> | del <key> | keys | peers | help | quit");
}
