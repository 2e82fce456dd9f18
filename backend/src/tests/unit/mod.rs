pub mod playbooks;
