pub mod sync_loop;
