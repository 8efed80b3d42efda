pub mod hot;
pub mod tosca_v1_x;
pub mod tosca_v2_0;
