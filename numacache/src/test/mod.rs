mod set_cache;
