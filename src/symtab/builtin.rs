//! Built-in OVN logical-flow symbols.
//!
//! Order matters: subfields and predicates refer to symbols defined above them.

use super::SymbolDef;

fn string(name: &str) -> SymbolDef {
    SymbolDef::String {
        name: name.into(),
        prereqs: None,
    }
}

fn field(name: &str, width: u32, maskable: bool, prereqs: Option<&str>, must_crossproduct: bool) -> SymbolDef {
    SymbolDef::Field {
        name: name.into(),
        width,
        maskable,
        prereqs: prereqs.map(Into::into),
        must_crossproduct,
    }
}

/// A fully maskable field with no crossproduct requirement.
fn ordinal(name: &str, width: u32, prereqs: Option<&str>) -> SymbolDef {
    field(name, width, true, prereqs, false)
}

fn subfield(name: &str, prereqs: Option<&str>, subfield: &str) -> SymbolDef {
    SymbolDef::Subfield {
        name: name.into(),
        prereqs: prereqs.map(Into::into),
        subfield: subfield.into(),
    }
}

fn predicate(name: &str, expansion: &str) -> SymbolDef {
    SymbolDef::Predicate {
        name: name.into(),
        expansion: expansion.into(),
    }
}

pub(super) fn definitions() -> Vec<SymbolDef> {
    vec![
        // Logical ports live in registers but compare as strings.
        string("inport"),
        string("outport"),
        ordinal("xreg0", 64, None),
        ordinal("xreg1", 64, None),
        ordinal("xreg2", 64, None),
        subfield("reg0", None, "xreg0[32..63]"),
        subfield("reg1", None, "xreg0[0..31]"),
        subfield("reg2", None, "xreg1[32..63]"),
        subfield("reg3", None, "xreg1[0..31]"),
        subfield("reg4", None, "xreg2[32..63]"),
        subfield("reg5", None, "xreg2[0..31]"),
        // Ethernet and VLAN.
        ordinal("eth.src", 48, None),
        ordinal("eth.dst", 48, None),
        field("eth.type", 16, false, None, true),
        ordinal("vlan.tci", 16, None),
        predicate("vlan.present", "vlan.tci[12]"),
        subfield("vlan.pcp", Some("vlan.present"), "vlan.tci[13..15]"),
        subfield("vlan.vid", Some("vlan.present"), "vlan.tci[0..11]"),
        // IP.
        predicate("ip4", "eth.type == 0x800"),
        predicate("ip6", "eth.type == 0x86dd"),
        predicate("ip", "ip4 || ip6"),
        field("ip.proto", 8, false, Some("ip"), true),
        field("ip.dscp", 8, false, Some("ip"), false),
        field("ip.ecn", 2, false, Some("ip"), false),
        field("ip.ttl", 8, false, Some("ip"), false),
        ordinal("ip4.src", 32, Some("ip4")),
        ordinal("ip4.dst", 32, Some("ip4")),
        predicate("icmp4", "ip4 && ip.proto == 1"),
        field("icmp4.type", 8, false, Some("icmp4"), false),
        field("icmp4.code", 8, false, Some("icmp4"), false),
        ordinal("ip6.src", 128, Some("ip6")),
        ordinal("ip6.dst", 128, Some("ip6")),
        ordinal("ip6.label", 20, Some("ip6")),
        predicate("icmp6", "ip6 && ip.proto == 58"),
        field("icmp6.type", 8, false, Some("icmp6"), true),
        field("icmp6.code", 8, false, Some("icmp6"), true),
        predicate("icmp", "icmp4 || icmp6"),
        // Fragments.
        ordinal("ip.frag", 2, Some("ip")),
        predicate("ip.is_frag", "ip.frag[0]"),
        predicate("ip.later_frag", "ip.frag[1]"),
        predicate("ip.first_frag", "ip.is_frag && !ip.later_frag"),
        // ARP and neighbor discovery.
        predicate("arp", "eth.type == 0x806"),
        field("arp.op", 16, false, Some("arp"), false),
        ordinal("arp.spa", 32, Some("arp")),
        ordinal("arp.sha", 48, Some("arp")),
        ordinal("arp.tpa", 32, Some("arp")),
        ordinal("arp.tha", 48, Some("arp")),
        predicate("nd", "icmp6.type == {135, 136} && icmp6.code == 0"),
        ordinal("nd.target", 128, Some("nd")),
        ordinal("nd.sll", 48, Some("nd && icmp6.type == 135")),
        ordinal("nd.tll", 48, Some("nd && icmp6.type == 136")),
        // Transport.
        predicate("tcp", "ip.proto == 6"),
        ordinal("tcp.src", 16, Some("tcp")),
        ordinal("tcp.dst", 16, Some("tcp")),
        ordinal("tcp.flags", 16, Some("tcp")),
        predicate("udp", "ip.proto == 17"),
        ordinal("udp.src", 16, Some("udp")),
        ordinal("udp.dst", 16, Some("udp")),
        predicate("sctp", "ip.proto == 132"),
        ordinal("sctp.src", 16, Some("sctp")),
        ordinal("sctp.dst", 16, Some("sctp")),
        // For negative testing.
        ordinal("bad_prereq", 64, Some("xyzzy")),
        ordinal("self_recurse", 64, Some("self_recurse != 0")),
        ordinal("mutual_recurse_1", 64, Some("mutual_recurse_2 != 0")),
        ordinal("mutual_recurse_2", 64, Some("mutual_recurse_1 != 0")),
        string("big_string"),
    ]
}
