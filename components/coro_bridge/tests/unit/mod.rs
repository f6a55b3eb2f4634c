mod handle_test;
mod thenable_test;
mod timer_test;
