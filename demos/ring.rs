//! Passes a growing token once around a ring of ranks.

use groupcomm::transport::local::run_group;

fn main() {
    env_logger::init();

    run_group(4, |universe| {
        let world = universe.world().unwrap();
        let rank = world.rank();
        let size = world.size();
        let next = (rank + 1) % size;
        let prev = (rank + size - 1) % size;

        if rank == 0 {
            world.send(b"0", next, 0).unwrap();
            let token = world.recv(prev, 0).unwrap();
            println!("token came home as {:?}", String::from_utf8_lossy(&token));
        } else {
            let mut token = world.recv(prev, 0).unwrap();
            token.extend_from_slice(format!("-{}", rank).as_bytes());
            world.send(&token, next, 0).unwrap();
        }
    });
}
