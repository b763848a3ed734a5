mod test_endpoint_failover;
mod test_inbound_filtering;
