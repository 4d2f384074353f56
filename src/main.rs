use actix_web::web;
use fwcmdb::config::{Config, Opt};
use fwcmdb::db::{self, PgStore};
use fwcmdb::memory::MemoryStore;
use fwcmdb::{http, logger, Repository};
use log::{error, warn};
use std::process;
use structopt::StructOpt;

fn main() {
    logger::init();
    let opt = Opt::from_args();

    let config = match Config::load(&opt) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    // The blocking postgres client drives its own runtime, so it has to be
    // connected before the actix system starts.
    let repo = if opt.in_memory {
        warn!("running with an in-memory store, entries are lost on exit");
        Repository::new(MemoryStore::new())
    } else {
        match db::init(&config.database) {
            Ok(client) => Repository::new(PgStore::new(client)),
            Err(e) => {
                error!(
                    "Failed to connect to database. It might not be up yet.\n{}",
                    e
                );
                process::exit(1);
            }
        }
    };
    let repo = web::Data::new(repo);

    // The postgres client owns a runtime, which may not be dropped from inside
    // an actix worker. Hold a handle here so the last reference is released
    // on this thread once the system has stopped.
    let served = actix_web::rt::System::new().block_on(http::serve(repo.clone(), &config));
    drop(repo);
    if let Err(e) = served {
        error!("server failed with: {}", e);
        process::exit(1);
    }
}
