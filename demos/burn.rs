//! A CPU-bound demo process for exercising each scheduling policy, grounded
//! on the teacher's `user/bin/primes.rs` style of standalone benchmark
//! binaries. Built as its own kernel image sharing `proc::user_init`'s
//! single-process boot path (there's no real `exec` in this core to load a
//! second program from), so it gives every `sched-*` feature something
//! CPU-bound to schedule for manual comparison under QEMU. The counting
//! logic itself lives in `kernel::demo` so the test suite can call it
//! directly without going through this binary.

#![no_std]
#![no_main]

use kernel::{console, demo, println, printf, proc, riscv};

#[unsafe(export_name = "main")]
extern "C" fn main() -> ! {
    unsafe { console::init() };
    proc::init();
    proc::user_init();
    riscv::interrupts::enable();

    let count = demo::count_primes(200_000, 5_000, proc::r#yield);
    println!("burn: counted {count} primes");

    proc::exit(0);
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    printf::handle_panic(info)
}
