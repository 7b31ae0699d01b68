//! Gathers fixed-size and variable-length contributions from every rank.

use groupcomm::transport::local::run_group;

fn main() {
    env_logger::init();

    run_group(3, |universe| {
        let world = universe.world().unwrap();
        let rank = world.rank();

        let ranks = world.all_gather(&rank).unwrap();
        if rank == 0 {
            println!("all_gather of ranks: {:?}", ranks);
        }

        // Every rank contributes a sequence of a different length.
        let mine: Vec<i32> = (0..rank).map(|i| rank * 100 + i).collect();
        let gathered = world.all_gather_varcount(&mine).unwrap();
        if rank == 0 {
            println!("all_gather_varcount: {:?}", gathered);
        }

        world.barrier().unwrap();
    });
}
