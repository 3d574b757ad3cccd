// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Mach-O and universal binary header decoding.

Only the leading header of an executable is examined. For a universal
("fat") binary that is the `fat_header` plus one `fat_arch` record per
architecture slice. For a single-architecture binary it is the magic plus
the `cputype` / `cpusubtype` fields of the `mach_header`.

Fat headers are always big-endian on disk. Single-architecture headers are
written in the byte order of the target CPU and the magic tells us which
order that is: `MH_MAGIC` / `MH_MAGIC_64` read as big-endian means the
header is big-endian, `MH_CIGAM` / `MH_CIGAM_64` means it is little-endian.
*/

use {
    crate::error::IpaValidateError,
    goblin::mach::{
        cputype::{
            CpuType, CPU_ARCH_ABI64, CPU_TYPE_ARM, CPU_TYPE_POWERPC, CPU_TYPE_SPARC, CPU_TYPE_X86,
        },
        fat::{FAT_MAGIC, SIZEOF_FAT_ARCH},
        header::{MH_CIGAM, MH_CIGAM_64, MH_MAGIC, MH_MAGIC_64},
    },
    log::debug,
    scroll::{Endian, Pread, BE, LE},
    serde::Serialize,
    std::{fs::File, io::Read, path::Path},
};

/// Mask isolating the CPU type from its capability bits.
const CPU_TYPE_MASK: u32 = 0x00ff_ffff;

const CPU_TYPE_NAMES: &[(CpuType, &str)] = &[
    (CPU_TYPE_X86, "x86"),
    (CPU_TYPE_ARM, "arm"),
    (CPU_TYPE_SPARC, "sparc"),
    (CPU_TYPE_POWERPC, "ppc"),
];

const ARM_SUBTYPE_NAMES: &[(i32, &str)] = &[
    (0, ""),
    (5, "armv4t"),
    (6, "armv6"),
    (7, "armv5tej"),
    (8, "armxscale"),
    (9, "armv7"),
    (10, "armv7f"),
    (11, "armv7s"),
    (12, "armv7k"),
    (14, "armv6m"),
    (15, "armv7m"),
    (16, "armv7em"),
];

/// Resolve the human readable name of a `cputype` header value.
///
/// Unknown types render as the hex value of the masked type. The 64-bit ABI
/// flag appends `64` to whatever name was resolved.
pub fn cpu_type_name(cpu_type: i32) -> String {
    let raw = cpu_type as u32;
    let base = raw & CPU_TYPE_MASK;

    let mut name = CPU_TYPE_NAMES
        .iter()
        .find(|(value, _)| *value == base)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("{:#x}", base));

    if raw & CPU_ARCH_ABI64 != 0 {
        name.push_str("64");
    }

    name
}

/// Resolve the human readable name of a `cpusubtype` header value.
///
/// Subtypes are only named for the ARM family. Every other CPU type yields
/// an empty string.
pub fn cpu_subtype_name(cpu_type: i32, cpu_subtype: i32) -> String {
    if cpu_type as u32 & CPU_TYPE_MASK != CPU_TYPE_ARM {
        return String::new();
    }

    ARM_SUBTYPE_NAMES
        .iter()
        .find(|(value, _)| *value == cpu_subtype)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("{:#x}", cpu_subtype as u32))
}

/// The kind of executable header that was found.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum BinaryKind {
    /// A single 32-bit Mach-O binary.
    #[serde(rename = "mach_o_binary")]
    MachO,
    /// A single 64-bit Mach-O binary.
    #[serde(rename = "mach_64_binary")]
    MachO64,
    /// A universal binary holding multiple architecture slices.
    #[serde(rename = "fat_binary")]
    Fat,
}

impl std::fmt::Display for BinaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::MachO => "mach_o_binary",
            Self::MachO64 => "mach_64_binary",
            Self::Fat => "fat_binary",
        })
    }
}

/// Where a slice lives inside a universal binary.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct FatArchPlacement {
    pub offset: u32,
    pub size: u32,
    pub align: u32,
}

/// A decoded architecture.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ArchSlice {
    /// CPU type name, e.g. `arm64`.
    pub cpu_type: String,

    /// CPU subtype name, e.g. `armv7s`. Empty for non-ARM types.
    pub cpu_subtype: String,

    /// Location of the slice for universal binaries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<FatArchPlacement>,
}

impl ArchSlice {
    fn new(cpu_type: i32, cpu_subtype: i32, placement: Option<FatArchPlacement>) -> Self {
        Self {
            cpu_type: cpu_type_name(cpu_type),
            cpu_subtype: cpu_subtype_name(cpu_type, cpu_subtype),
            placement,
        }
    }
}

/// Architecture information for an executable.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct BinaryInfo {
    pub binary_name: String,
    pub binary_kind: BinaryKind,
    pub arch_slices: Vec<ArchSlice>,
}

impl BinaryInfo {
    /// Decode the header of the executable at a filesystem path.
    ///
    /// `name` is the name the executable was declared under, normally the
    /// `CFBundleExecutable` value.
    pub fn from_path(path: impl AsRef<Path>, name: &str) -> Result<Self, IpaValidateError> {
        let path = path.as_ref();
        debug!("decoding Mach-O header of {}", path.display());

        let fh = File::open(path)?;
        Self::from_reader(fh, name)
    }

    /// Decode the header from a reader positioned at the start of the binary.
    pub fn from_reader(reader: impl Read, name: &str) -> Result<Self, IpaValidateError> {
        let mut reader = HeaderReader::new(reader);

        let magic = reader.read_u32(BE)?;

        let (binary_kind, arch_slices) = match magic {
            FAT_MAGIC => {
                let count = reader.read_u32(BE)?;
                debug!("universal binary declares {} architectures", count);

                let mut slices = Vec::with_capacity(count.min(64) as usize);
                for _ in 0..count {
                    let record = reader.read_bytes(SIZEOF_FAT_ARCH)?;
                    let cpu_type = record.pread_with::<i32>(0, BE)?;
                    let cpu_subtype = record.pread_with::<i32>(4, BE)?;
                    let placement = FatArchPlacement {
                        offset: record.pread_with::<u32>(8, BE)?,
                        size: record.pread_with::<u32>(12, BE)?,
                        align: record.pread_with::<u32>(16, BE)?,
                    };

                    slices.push(ArchSlice::new(cpu_type, cpu_subtype, Some(placement)));
                }

                (BinaryKind::Fat, slices)
            }
            MH_MAGIC => (BinaryKind::MachO, vec![reader.read_arch(BE)?]),
            MH_CIGAM => (BinaryKind::MachO, vec![reader.read_arch(LE)?]),
            MH_MAGIC_64 => (BinaryKind::MachO64, vec![reader.read_arch(BE)?]),
            MH_CIGAM_64 => (BinaryKind::MachO64, vec![reader.read_arch(LE)?]),
            _ => return Err(IpaValidateError::UnknownMagic(magic)),
        };

        Ok(Self {
            binary_name: name.to_string(),
            binary_kind,
            arch_slices,
        })
    }

    /// Whether any slice targets an ARM CPU, the only family iOS devices run.
    pub fn targets_arm(&self) -> bool {
        self.arch_slices
            .iter()
            .any(|slice| slice.cpu_type.starts_with("arm"))
    }
}

/// Sequential reader over header bytes that tracks its offset.
struct HeaderReader<R> {
    inner: R,
    offset: usize,
}

impl<R: Read> HeaderReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    fn read_bytes(&mut self, wanted: usize) -> Result<Vec<u8>, IpaValidateError> {
        let mut buffer = vec![0u8; wanted];
        let offset = self.offset;

        self.inner.read_exact(&mut buffer).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                IpaValidateError::TruncatedHeader { offset, wanted }
            } else {
                IpaValidateError::Io(e)
            }
        })?;
        self.offset += wanted;

        Ok(buffer)
    }

    fn read_u32(&mut self, endian: Endian) -> Result<u32, IpaValidateError> {
        Ok(self.read_bytes(4)?.pread_with::<u32>(0, endian)?)
    }

    /// Read the `cputype` and `cpusubtype` fields following a thin magic.
    fn read_arch(&mut self, endian: Endian) -> Result<ArchSlice, IpaValidateError> {
        let data = self.read_bytes(8)?;

        Ok(ArchSlice::new(
            data.pread_with::<i32>(0, endian)?,
            data.pread_with::<i32>(4, endian)?,
            None,
        ))
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::io::Cursor};

    fn fat_binary(arches: &[(i32, i32)]) -> Vec<u8> {
        let mut data = vec![];
        data.extend_from_slice(&0xcafebabeu32.to_be_bytes());
        data.extend_from_slice(&(arches.len() as u32).to_be_bytes());

        for (i, (cpu_type, cpu_subtype)) in arches.iter().enumerate() {
            data.extend_from_slice(&cpu_type.to_be_bytes());
            data.extend_from_slice(&cpu_subtype.to_be_bytes());
            data.extend_from_slice(&((i as u32 + 1) * 0x4000).to_be_bytes());
            data.extend_from_slice(&0x1000u32.to_be_bytes());
            data.extend_from_slice(&14u32.to_be_bytes());
        }

        data
    }

    fn decode(data: &[u8]) -> Result<BinaryInfo, IpaValidateError> {
        BinaryInfo::from_reader(Cursor::new(data), "Demo")
    }

    #[test]
    fn cpu_types() {
        assert_eq!(cpu_type_name(7), "x86");
        assert_eq!(cpu_type_name(0x0100_0007), "x8664");
        assert_eq!(cpu_type_name(12), "arm");
        assert_eq!(cpu_type_name(0x0100_000c), "arm64");
        assert_eq!(cpu_type_name(14), "sparc");
        assert_eq!(cpu_type_name(18), "ppc");
        assert_eq!(cpu_type_name(0x0100_0012), "ppc64");
        assert_eq!(cpu_type_name(0x2a), "0x2a");
        assert_eq!(cpu_type_name(0x0100_002a), "0x2a64");
        // ARM64_32 carries a different capability bit which is masked away.
        assert_eq!(cpu_type_name(0x0200_000c), "arm");
    }

    #[test]
    fn cpu_subtypes() {
        assert_eq!(cpu_subtype_name(12, 0), "");
        assert_eq!(cpu_subtype_name(12, 9), "armv7");
        assert_eq!(cpu_subtype_name(12, 11), "armv7s");
        assert_eq!(cpu_subtype_name(12, 16), "armv7em");
        assert_eq!(cpu_subtype_name(12, 13), "0xd");
        assert_eq!(cpu_subtype_name(0x0100_000c, 2), "0x2");
        assert_eq!(cpu_subtype_name(7, 3), "");
        assert_eq!(cpu_subtype_name(0x0100_0007, 9), "");
        assert_eq!(cpu_subtype_name(18, 100), "");
    }

    #[test]
    fn fat_preserves_order() -> Result<(), IpaValidateError> {
        let info = decode(&fat_binary(&[(12, 9), (12, 11), (0x0100_000c, 0)]))?;

        assert_eq!(info.binary_kind, BinaryKind::Fat);
        assert_eq!(info.binary_name, "Demo");
        assert_eq!(
            info.arch_slices
                .iter()
                .map(|s| (s.cpu_type.as_str(), s.cpu_subtype.as_str()))
                .collect::<Vec<_>>(),
            vec![("arm", "armv7"), ("arm", "armv7s"), ("arm64", "")]
        );
        assert_eq!(
            info.arch_slices[1].placement,
            Some(FatArchPlacement {
                offset: 0x8000,
                size: 0x1000,
                align: 14
            })
        );
        assert!(info.targets_arm());

        Ok(())
    }

    #[test]
    fn fat_empty() -> Result<(), IpaValidateError> {
        let info = decode(&fat_binary(&[]))?;
        assert_eq!(info.binary_kind, BinaryKind::Fat);
        assert!(info.arch_slices.is_empty());
        assert!(!info.targets_arm());

        Ok(())
    }

    #[test]
    fn fat_truncated() {
        let mut data = fat_binary(&[(12, 9), (12, 11)]);
        data.truncate(data.len() - 3);

        assert!(matches!(
            decode(&data),
            Err(IpaValidateError::TruncatedHeader {
                offset: 28,
                wanted: 20
            })
        ));
    }

    #[test]
    fn thin_variants() -> Result<(), IpaValidateError> {
        // Little-endian arm64, as produced for iOS devices.
        let info = decode(&[
            0xcf, 0xfa, 0xed, 0xfe, 0x0c, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
        ])?;
        assert_eq!(info.binary_kind, BinaryKind::MachO64);
        assert_eq!(info.arch_slices.len(), 1);
        assert_eq!(info.arch_slices[0].cpu_type, "arm64");
        assert_eq!(info.arch_slices[0].cpu_subtype, "");
        assert_eq!(info.arch_slices[0].placement, None);

        // Big-endian 64-bit header.
        let info = decode(&[
            0xfe, 0xed, 0xfa, 0xcf, 0x01, 0x00, 0x00, 0x12, 0x00, 0x00, 0x00, 0x00,
        ])?;
        assert_eq!(info.binary_kind, BinaryKind::MachO64);
        assert_eq!(info.arch_slices[0].cpu_type, "ppc64");

        // Little-endian armv7s.
        let info = decode(&[
            0xce, 0xfa, 0xed, 0xfe, 0x0c, 0x00, 0x00, 0x00, 0x0b, 0x00, 0x00, 0x00,
        ])?;
        assert_eq!(info.binary_kind, BinaryKind::MachO);
        assert_eq!(info.arch_slices[0].cpu_type, "arm");
        assert_eq!(info.arch_slices[0].cpu_subtype, "armv7s");

        // Big-endian 32-bit PowerPC.
        let info = decode(&[
            0xfe, 0xed, 0xfa, 0xce, 0x00, 0x00, 0x00, 0x12, 0x00, 0x00, 0x00, 0x0a,
        ])?;
        assert_eq!(info.binary_kind, BinaryKind::MachO);
        assert_eq!(info.arch_slices[0].cpu_type, "ppc");
        assert_eq!(info.arch_slices[0].cpu_subtype, "");

        Ok(())
    }

    #[test]
    fn thin_64_always_suffixed() -> Result<(), IpaValidateError> {
        for cpu_type in [7u32, 12, 14, 18, 0x99] {
            let mut data = vec![0xcf, 0xfa, 0xed, 0xfe];
            data.extend_from_slice(&(cpu_type | 0x0100_0000).to_le_bytes());
            data.extend_from_slice(&0u32.to_le_bytes());

            let info = decode(&data)?;
            assert!(info.arch_slices[0].cpu_type.ends_with("64"));
        }

        Ok(())
    }

    #[test]
    fn unknown_magic() {
        let res = decode(&[0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 0]);

        match res {
            Err(e @ IpaValidateError::UnknownMagic(0xdeadbeef)) => {
                assert!(e.to_string().contains("0xdeadbeef"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn short_files() {
        assert!(matches!(
            decode(&[0xca, 0xfe]),
            Err(IpaValidateError::TruncatedHeader {
                offset: 0,
                wanted: 4
            })
        ));
        assert!(matches!(
            decode(&[0xcf, 0xfa, 0xed, 0xfe, 0x0c]),
            Err(IpaValidateError::TruncatedHeader {
                offset: 4,
                wanted: 8
            })
        ));
    }

    #[test]
    fn from_path() -> Result<(), IpaValidateError> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("Demo");
        std::fs::write(&path, fat_binary(&[(7, 3), (0x0100_0007, 3)]))?;

        let info = BinaryInfo::from_path(&path, "Demo")?;
        assert_eq!(info.arch_slices.len(), 2);
        assert_eq!(info.arch_slices[0].cpu_type, "x86");
        assert_eq!(info.arch_slices[1].cpu_type, "x8664");
        assert!(!info.targets_arm());

        Ok(())
    }
}
