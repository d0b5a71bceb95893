#![no_std]
#![no_main]

use core::sync::atomic::{AtomicBool, Ordering};

use kernel::console;
use kernel::printf;
use kernel::println;
use kernel::proc;
use kernel::riscv;
use kernel::trap;

static STARTED: AtomicBool = AtomicBool::new(false);

#[unsafe(export_name = "main")]
extern "C" fn main() -> ! {
    let cpu_id = unsafe { proc::current_id() };

    if cpu_id == 0 {
        unsafe { console::init() };

        println!();
        println!("campuskernel is booting");
        println!();

        proc::init();
        trap::init();
        proc::user_init();

        println!("hart {cpu_id} is starting");
        STARTED.store(true, Ordering::SeqCst);
    } else {
        while !STARTED.load(Ordering::SeqCst) {
            core::hint::spin_loop();
        }
        println!("hart {cpu_id} is starting");
    }

    riscv::interrupts::enable();
    proc::scheduler();
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    printf::handle_panic(info)
}
