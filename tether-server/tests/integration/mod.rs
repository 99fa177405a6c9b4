pub mod call_flow_tests;
pub mod room_scenario_tests;
pub mod ws_transport_tests;
